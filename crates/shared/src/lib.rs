//! Wire-level types shared between the Quill API server and its clients.

pub mod api;
