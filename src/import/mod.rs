pub(crate) mod channels;
pub(crate) mod descriptor;
pub(crate) mod hints;
pub(crate) mod importer;
pub(crate) mod psd;
pub(crate) mod reader;
pub(crate) mod tree;
