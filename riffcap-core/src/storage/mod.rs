pub mod stream_file;
