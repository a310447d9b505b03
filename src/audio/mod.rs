pub(crate) mod effects;
pub(crate) mod envelope;
pub(crate) mod mix;
pub(crate) mod resample;
pub(crate) mod wav;
