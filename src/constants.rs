// Can this ever change?
pub const CHALLENGE_SIZE_BYTES: usize = 32;

// Authenticator data flag bits.
pub const FLAG_USER_PRESENT: u8 = 0x01;
pub const FLAG_USER_VERIFIED: u8 = 0x04;
pub const FLAG_ATTESTED_CRED_DATA: u8 = 0x40;
pub const FLAG_EXTENSION_DATA: u8 = 0x80;

// U2F transports raw P-256 points only: tag byte plus both coordinates.
pub(crate) const U2F_COORDINATE_SIZE: usize = 32;
pub(crate) const U2F_PUBLIC_KEY_LEN: usize = 1 + 2 * U2F_COORDINATE_SIZE;

/// SHA-256 digests of attestation certificates shipped by a batch of
/// authenticators whose signature BIT STRING carries a nonzero unused-bits
/// octet. The octet at `len - 257` must be forced to zero before the
/// certificate can be used, or every signature check against it fails.
pub(crate) const U2F_CERTIFICATE_FIXES: [[u8; 32]; 6] = [
    [
        0x34, 0x9b, 0xca, 0x10, 0x31, 0xf8, 0xc8, 0x2c,
        0x4c, 0xec, 0xa3, 0x8b, 0x9c, 0xeb, 0xf1, 0xa6,
        0x9d, 0xf9, 0xfb, 0x3b, 0x94, 0xee, 0xd9, 0x9e,
        0xb3, 0xfb, 0x9a, 0xa3, 0x82, 0x2d, 0x26, 0xe8,
    ],
    [
        0xdd, 0x57, 0x45, 0x27, 0xdf, 0x60, 0x8e, 0x47,
        0xae, 0x45, 0xfb, 0xba, 0x75, 0xa2, 0xaf, 0xdd,
        0x5c, 0x20, 0xfd, 0x94, 0xa0, 0x24, 0x19, 0x38,
        0x18, 0x13, 0xcd, 0x55, 0xa2, 0xa3, 0x39, 0x8f,
    ],
    [
        0x1d, 0x87, 0x64, 0xf0, 0xf7, 0xcd, 0x13, 0x52,
        0xdf, 0x61, 0x50, 0x04, 0x5c, 0x8f, 0x63, 0x8e,
        0x51, 0x72, 0x70, 0xe8, 0xb5, 0xdd, 0xa1, 0xc6,
        0x3a, 0xde, 0x9c, 0x22, 0x80, 0x24, 0x0c, 0xae,
    ],
    [
        0xd0, 0xed, 0xc9, 0xa9, 0x1a, 0x16, 0x77, 0x43,
        0x5a, 0x95, 0x33, 0x90, 0x86, 0x5d, 0x20, 0x8c,
        0x55, 0xb3, 0x18, 0x3c, 0x67, 0x59, 0xc9, 0xb5,
        0xa7, 0xff, 0x49, 0x4c, 0x32, 0x25, 0x58, 0xeb,
    ],
    [
        0x60, 0x73, 0xc4, 0x36, 0xdc, 0xd0, 0x64, 0xa4,
        0x81, 0x27, 0xdd, 0xbf, 0x60, 0x32, 0xac, 0x1a,
        0x66, 0xfd, 0x59, 0xa0, 0xc2, 0x44, 0x34, 0xf0,
        0x70, 0xd4, 0xe5, 0x64, 0xc1, 0x24, 0xc8, 0x97,
    ],
    [
        0xca, 0x99, 0x31, 0x21, 0x84, 0x6c, 0x46, 0x4d,
        0x66, 0x60, 0x96, 0xd3, 0x5f, 0x13, 0xbf, 0x44,
        0xc1, 0xb0, 0x5a, 0xf2, 0x05, 0xf9, 0xb4, 0xa1,
        0xe0, 0x0c, 0xf6, 0xcc, 0x10, 0xc5, 0xe5, 0x11,
    ],
];
