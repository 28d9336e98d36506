pub(crate) mod encoder;
pub(crate) mod ffmpeg;
pub(crate) mod mjpeg;
