//! Macros for reading raw frames from a [`ClientEnd`](crate::ClientEnd).

/// Read the next raw frame the session wrote to `client`.
///
/// Use this when a test pins the exact wire text. The test panics at the
/// calling line if the session dropped its outbound sink first.
#[macro_export]
macro_rules! next_frame {
    ($client:expr) => {
        match $client.recv().await {
            Some(frame) => frame,
            None => panic!(
                "session closed its sink before writing a frame ({}:{})",
                file!(),
                line!()
            ),
        }
    };
}

pub use crate::next_frame;
