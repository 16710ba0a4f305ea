//! Semantic analysis: types, scopes and the function table are built here
//! and every node the code generator needs is annotated.

pub mod diagnostic;
pub mod function_table;
pub mod scope;
pub mod ty;
pub mod type_check;
