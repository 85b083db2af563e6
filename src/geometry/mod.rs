pub(crate) mod affine;
pub(crate) mod homography;
pub(crate) mod quad;
