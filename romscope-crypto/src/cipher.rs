//! AES with runtime-selected key size and chaining mode.
//!
//! The cipher is stateless between calls: CBC and CTR always start from the
//! IV held by the cipher (plus an explicit byte offset for CTR), so callers
//! that read encrypted data out of order derive the IV for each position
//! themselves instead of relying on continuation state.

use std::fmt;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::consts::U16;
use aes::cipher::{
    BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, BlockSizeUser,
    KeyInit, KeyIvInit, StreamCipher, StreamCipherSeek,
};
use aes::{Aes128, Aes192, Aes256};

use crate::CryptoError;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Block chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainingMode {
    #[default]
    Ecb,
    Cbc,
    /// Big-endian 128-bit counter.
    Ctr,
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// An AES key plus chaining parameters.
#[derive(Clone)]
pub struct AesCipher {
    key: Vec<u8>,
    mode: ChainingMode,
    iv: [u8; BLOCK_SIZE],
}

impl AesCipher {
    /// Create an ECB cipher. The key must be 16, 24 or 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        match key.len() {
            16 | 24 | 32 => Ok(Self {
                key: key.to_vec(),
                mode: ChainingMode::Ecb,
                iv: [0; BLOCK_SIZE],
            }),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }

    pub fn with_mode(mut self, mode: ChainingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_iv(mut self, iv: [u8; BLOCK_SIZE]) -> Self {
        self.iv = iv;
        self
    }

    pub fn mode(&self) -> ChainingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ChainingMode) {
        self.mode = mode;
    }

    /// Set the CBC IV or the CTR base counter.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        self.iv = iv
            .try_into()
            .map_err(|_| CryptoError::InvalidIvLength(iv.len()))?;
        Ok(())
    }

    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    /// Decrypt `buf` in place.
    ///
    /// ECB and CBC require a whole number of blocks; CTR accepts any length
    /// and starts at the beginning of the keystream.
    pub fn decrypt(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.run(buf, Direction::Decrypt, 0)
    }

    /// Encrypt `buf` in place. Same length rules as [`decrypt`](Self::decrypt).
    pub fn encrypt(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        self.run(buf, Direction::Encrypt, 0)
    }

    /// Apply the CTR keystream to `buf`, starting `offset` bytes past the
    /// base counter. Encryption and decryption are the same operation.
    pub fn ctr_apply_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), CryptoError> {
        if self.mode != ChainingMode::Ctr {
            return Err(CryptoError::InitFailed);
        }
        self.run(buf, Direction::Decrypt, offset)
    }

    fn run(&self, buf: &mut [u8], dir: Direction, offset: u64) -> Result<(), CryptoError> {
        match self.key.len() {
            16 => apply::<Aes128>(&self.key, self.mode, &self.iv, buf, dir, offset),
            24 => apply::<Aes192>(&self.key, self.mode, &self.iv, buf, dir, offset),
            32 => apply::<Aes256>(&self.key, self.mode, &self.iv, buf, dir, offset),
            n => Err(CryptoError::InvalidKeyLength(n)),
        }
    }
}

impl fmt::Debug for AesCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesCipher")
            .field("key_bits", &(self.key.len() * 8))
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn apply<C>(
    key: &[u8],
    mode: ChainingMode,
    iv: &[u8; BLOCK_SIZE],
    buf: &mut [u8],
    dir: Direction,
    offset: u64,
) -> Result<(), CryptoError>
where
    C: BlockCipher + BlockSizeUser<BlockSize = U16> + BlockEncrypt + BlockDecrypt + KeyInit,
{
    let len = buf.len();
    if mode != ChainingMode::Ctr && len % BLOCK_SIZE != 0 {
        return Err(CryptoError::Unaligned(len));
    }

    match mode {
        ChainingMode::Ecb => {
            let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InitFailed)?;
            for block in buf.chunks_exact_mut(BLOCK_SIZE) {
                let block = aes::Block::from_mut_slice(block);
                match dir {
                    Direction::Encrypt => cipher.encrypt_block(block),
                    Direction::Decrypt => cipher.decrypt_block(block),
                }
            }
        }
        ChainingMode::Cbc => match dir {
            Direction::Decrypt => {
                cbc::Decryptor::<C>::new_from_slices(key, iv)
                    .map_err(|_| CryptoError::InitFailed)?
                    .decrypt_padded_mut::<NoPadding>(buf)
                    .map_err(|_| CryptoError::Unaligned(len))?;
            }
            Direction::Encrypt => {
                cbc::Encryptor::<C>::new_from_slices(key, iv)
                    .map_err(|_| CryptoError::InitFailed)?
                    .encrypt_padded_mut::<NoPadding>(buf, len)
                    .map_err(|_| CryptoError::Unaligned(len))?;
            }
        },
        ChainingMode::Ctr => {
            let mut stream = ctr::Ctr128BE::<C>::new_from_slices(key, iv)
                .map_err(|_| CryptoError::InitFailed)?;
            stream
                .try_seek(offset)
                .map_err(|_| CryptoError::CounterOverflow)?;
            stream
                .try_apply_keystream(buf)
                .map_err(|_| CryptoError::CounterOverflow)?;
        }
    }
    Ok(())
}

/// Add `blocks` to a big-endian 128-bit counter.
pub fn counter_add(counter: &[u8; BLOCK_SIZE], blocks: u64) -> [u8; BLOCK_SIZE] {
    u128::from_be_bytes(*counter)
        .wrapping_add(blocks as u128)
        .to_be_bytes()
}

#[cfg(test)]
#[path = "tests/cipher_tests.rs"]
mod tests;
