pub mod ply;
pub mod prt;
