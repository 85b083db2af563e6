//! Plan execution on the CPU: perspective drawing, masking, blending and output encoding.

pub(crate) mod backend;
pub(crate) mod composite;
pub(crate) mod cpu;
pub(crate) mod mask;
pub(crate) mod output;
pub(crate) mod perspective;
pub(crate) mod renderer;
pub(crate) mod surface_pool;
