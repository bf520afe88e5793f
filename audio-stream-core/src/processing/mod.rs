pub mod chunk_accumulator;
pub mod pcm;
pub mod sample_converter;
