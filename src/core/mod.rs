// src/core/mod.rs

pub mod html;
pub mod sanitize;
pub mod slug;

pub use slug::{ PlaceKey, PlaceSlug };
