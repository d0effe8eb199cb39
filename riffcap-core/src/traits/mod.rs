pub mod stream_delegate;
