use std::path::Path;

/// Renders a program and its arguments as a single line for logs and error messages.
pub(crate) fn command_line<S: AsRef<str>>(program: &Path, args: &[S]) -> String {
    let mut line = program.to_string_lossy().into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(arg.as_ref());
    }
    line
}
