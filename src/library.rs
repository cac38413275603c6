pub mod book;

pub use book::{Book, BookMap, merge_book, union_shelves};
