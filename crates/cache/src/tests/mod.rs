//! End-to-end cache scenarios over the in-process cluster
