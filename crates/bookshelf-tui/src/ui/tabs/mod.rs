pub mod books;
pub mod borrows;
pub mod profile;
