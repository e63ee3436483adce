//! Library domain: authors, books, students and loans.

pub mod author;
pub mod book;
mod console;
pub mod loan;
pub mod student;

pub use author::{Author, AuthorPatch, NewAuthor};
pub use book::{Book, BookPatch, Category, NewBook};
pub use console::Library;
pub use loan::{Loan, LoanPatch, LoanStatus, NewLoan};
pub use student::{Course, NewStudent, Student, StudentPatch};
