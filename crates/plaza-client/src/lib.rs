pub mod interp;
pub mod roster;
