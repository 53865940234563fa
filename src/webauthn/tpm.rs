// Copyright 2023 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! TPM 2.0 structures carried in `tpm` attestation statements, see Part 2 of
//! the "Trusted Platform Module Library" specification (rev. 1.59).

use super::errors::Error;
use openssl::hash::{hash, MessageDigest};

pub const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
pub const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

pub const TPM_ALG_RSA: u16 = 0x0001;
pub const TPM_ALG_SHA1: u16 = 0x0004;
pub const TPM_ALG_SHA256: u16 = 0x000b;
pub const TPM_ALG_SHA384: u16 = 0x000c;
pub const TPM_ALG_SHA512: u16 = 0x000d;
pub const TPM_ALG_NULL: u16 = 0x0010;
pub const TPM_ALG_ECC: u16 = 0x0023;

pub const TPM_ECC_NIST_P256: u16 = 0x0003;
pub const TPM_ECC_NIST_P384: u16 = 0x0004;
pub const TPM_ECC_NIST_P521: u16 = 0x0005;

/// Big-endian cursor over a TPM marshalled structure
struct Reader<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], what: &'static str) -> Self {
        Reader { buf, what }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() < n {
            return Err(Error::Verification(format!("truncated {}", self.what)));
        }

        let (h, t) = self.buf.split_at(n);
        self.buf = t;
        Ok(h)
    }

    fn u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, Error> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    /// A TPM2B: 16-bit size followed by that many bytes
    fn sized(&mut self) -> Result<&'a [u8], Error> {
        let n = self.u16()? as usize;
        self.take(n)
    }

    fn finish(self) -> Result<(), Error> {
        if !self.buf.is_empty() {
            return Err(Error::Verification(format!(
                "{} trailing bytes in {}",
                self.buf.len(),
                self.what
            )));
        }

        Ok(())
    }
}

/// Hash `data` with the TPM algorithm `alg`
pub fn name_hash(alg: u16, data: &[u8]) -> Result<Vec<u8>, Error> {
    let md = match alg {
        TPM_ALG_SHA1 => MessageDigest::sha1(),
        TPM_ALG_SHA256 => MessageDigest::sha256(),
        TPM_ALG_SHA384 => MessageDigest::sha384(),
        TPM_ALG_SHA512 => MessageDigest::sha512(),
        a => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "TPM hash algorithm {a:#06x}"
            )))
        }
    };

    Ok(hash(md, data)?.to_vec())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmPublicKey {
    Rsa {
        key_bits: u16,
        /// 0 stands for the default exponent 65537
        exponent: u32,
        modulus: Vec<u8>,
    },
    Ecc {
        curve_id: u16,
        x: Vec<u8>,
        y: Vec<u8>,
    },
}

/// TPMT_PUBLIC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubArea {
    pub alg_type: u16,
    pub name_alg: u16,
    pub object_attributes: u32,
    pub auth_policy: Vec<u8>,
    pub key: TpmPublicKey,
}

impl PubArea {
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf, "pubArea");

        let alg_type = r.u16()?;
        let name_alg = r.u16()?;
        let object_attributes = r.u32()?;
        let auth_policy = r.sized()?.to_vec();

        let key = match alg_type {
            TPM_ALG_RSA => {
                skip_symmetric(&mut r)?;
                skip_scheme(&mut r)?;
                let key_bits = r.u16()?;
                let exponent = r.u32()?;
                let modulus = r.sized()?.to_vec();

                TpmPublicKey::Rsa {
                    key_bits,
                    exponent,
                    modulus,
                }
            }
            TPM_ALG_ECC => {
                skip_symmetric(&mut r)?;
                skip_scheme(&mut r)?;
                let curve_id = r.u16()?;
                // kdf
                skip_scheme(&mut r)?;
                let x = r.sized()?.to_vec();
                let y = r.sized()?.to_vec();

                TpmPublicKey::Ecc { curve_id, x, y }
            }
            t => {
                return Err(Error::Verification(format!(
                    "unsupported pubArea type {t:#06x}"
                )))
            }
        };

        r.finish()?;

        Ok(PubArea {
            alg_type,
            name_alg,
            object_attributes,
            auth_policy,
            key,
        })
    }
}

// attestation keys are signing keys and carry no symmetric definition
fn skip_symmetric(r: &mut Reader) -> Result<(), Error> {
    match r.u16()? {
        TPM_ALG_NULL => Ok(()),
        a => Err(Error::Verification(format!(
            "unexpected symmetric algorithm {a:#06x} in pubArea"
        ))),
    }
}

fn skip_scheme(r: &mut Reader) -> Result<(), Error> {
    if r.u16()? != TPM_ALG_NULL {
        // TPMS_SCHEME_HASH
        r.u16()?;
    }

    Ok(())
}

/// TPMS_CLOCK_INFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: bool,
}

/// TPMS_ATTEST with a TPMS_CERTIFY_INFO body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub magic: u32,
    pub attest_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    pub attested_name: Vec<u8>,
    pub attested_qualified_name: Vec<u8>,
}

impl CertInfo {
    pub fn parse(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(buf, "certInfo");

        let magic = r.u32()?;
        if magic != TPM_GENERATED_VALUE {
            return Err(Error::Verification(format!(
                "certInfo magic is {magic:#010x}, expecting {TPM_GENERATED_VALUE:#010x}"
            )));
        }

        let attest_type = r.u16()?;
        if attest_type != TPM_ST_ATTEST_CERTIFY {
            return Err(Error::Verification(format!(
                "certInfo type is {attest_type:#06x}, expecting {TPM_ST_ATTEST_CERTIFY:#06x}"
            )));
        }

        let qualified_signer = r.sized()?.to_vec();
        let extra_data = r.sized()?.to_vec();
        let clock_info = ClockInfo {
            clock: r.u64()?,
            reset_count: r.u32()?,
            restart_count: r.u32()?,
            safe: r.u8()? != 0,
        };
        let firmware_version = r.u64()?;
        let attested_name = r.sized()?.to_vec();
        let attested_qualified_name = r.sized()?.to_vec();

        r.finish()?;

        Ok(CertInfo {
            magic,
            attest_type,
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            attested_name,
            attested_qualified_name,
        })
    }
}
