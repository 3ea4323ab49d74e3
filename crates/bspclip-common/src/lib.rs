#![allow(dead_code)]
#![allow(clippy::needless_return, clippy::too_many_arguments, clippy::collapsible_if,
         clippy::collapsible_else_if, clippy::manual_range_contains, clippy::comparison_chain,
         clippy::identity_op, clippy::float_cmp, clippy::needless_range_loop,
         clippy::manual_clamp, clippy::type_complexity, clippy::nonminimal_bool)]

pub mod q_shared;
pub mod common;
pub mod cvar;
pub mod qfiles;
pub mod polylib;
pub mod patch;
pub mod cmodel;
pub mod trace;
