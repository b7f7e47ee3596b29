//! Request and response bodies of the Deckhand REST API.

pub mod models;
