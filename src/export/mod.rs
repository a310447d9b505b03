pub(crate) mod ffmpeg;
pub(crate) mod normalize;
pub(crate) mod sink;
