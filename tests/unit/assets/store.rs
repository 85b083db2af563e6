use super::*;

#[test]
fn content_key_depends_on_bytes_and_dims() {
    let a = ContentKey::for_pixels(&[1, 2, 3, 4], 1, 1);
    assert_eq!(a, ContentKey::for_pixels(&[1, 2, 3, 4], 1, 1));
    assert_ne!(a, ContentKey::for_pixels(&[1, 2, 3, 5], 1, 1));
    assert_ne!(
        ContentKey::for_pixels(&[0; 8], 2, 1),
        ContentKey::for_pixels(&[0; 8], 1, 2)
    );
    assert_ne!(ContentKey::for_blob(&[1, 2, 3, 4]).hash(), a.hash());
}

#[test]
fn from_premul_validates_length() {
    assert!(PreparedImage::from_premul(2, 2, vec![0; 15]).is_err());
    assert!(PreparedImage::from_premul(0, 2, vec![]).is_err());
    let img = PreparedImage::from_premul(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(img.pixel(1, 0), [5, 6, 7, 8]);
    assert_eq!(img.pixel(2, 0), [0, 0, 0, 0]);
    assert_eq!(img.pixel(-1, 0), [0, 0, 0, 0]);
}
