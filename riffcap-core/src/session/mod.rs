pub mod stream_writer;
