use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imagemagick::options::{crop_args, crop_command, resize_args};
use imagemagick::parse::{parse_exif, parse_identify};
use imagemagick::ResizeOptions;

const EXIF_DUMP: &str = "exif:ApertureValue=4281/1441
exif:BrightnessValue=8.2
exif:ColorSpace=1
exif:DateTime=2020:01:15 10:30:00
exif:DateTimeDigitized=2020:01:15 10:30:00
exif:DateTimeOriginal=2020:01:15 10:30:00
exif:ExifImageLength=3024
exif:ExifImageWidth=4032
exif:ExifOffset=204
exif:ExposureMode=0
exif:ExposureProgram=2
exif:Flash=16
exif:FNumber=9/5
exif:FocalLength=17/4
exif:FocalLengthIn35mmFilm=26
exif:ISOSpeedRatings=32
exif:LensModel=iPhone 11 back dual wide camera 4.25mm f/1.8
exif:Make=Apple
exif:MeteringMode=5
exif:Model=iPhone 11
exif:Orientation=1
exif:ResolutionUnit=2
exif:SceneCaptureType=0
exif:Software=14.2
exif:SubSecTimeDigitized=058
exif:SubSecTimeOriginal=058
exif:WhiteBalance=0
exif:XResolution=72/1
exif:YCbCrPositioning=1
exif:YResolution=72/1
";

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_identify", |b| {
        b.iter(|| parse_identify(black_box("JPEG 4032 3024 8 92")))
    });

    c.bench_function("parse_exif", |b| b.iter(|| parse_exif(black_box(EXIF_DUMP))));

    let options = ResizeOptions::from_path("data/image.jpg")
        .with_size(320, 320)
        .with_destination("thumb.jpg");
    c.bench_function("resize_args", |b| b.iter(|| resize_args(black_box(&options))));

    c.bench_function("crop_args", |b| {
        b.iter(|| {
            let command = crop_command(black_box(&options)).unwrap();
            crop_args(&command, 4032, 3024)
        })
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
