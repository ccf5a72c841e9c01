//! Secure memory containers for key material.
//!
//! Both containers zero their contents on drop, lock their pages in
//! RAM on a best-effort basis (`mlock`), and mask `Debug` output so a
//! stray log line never leaks bytes.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ---------------------------------------------------------------------------
// Page locking
// ---------------------------------------------------------------------------

/// Best-effort `mlock` guard. Unlocks the region on drop.
///
/// If `mlock` fails (privileges, RLIMIT_MEMLOCK) the region simply
/// stays unlocked; zeroize-on-drop does not depend on it.
struct PageLock {
    ptr: *const u8,
    len: usize,
    active: bool,
}

// SAFETY: the pointer is used only for mlock/munlock syscalls; the
// pointed-to bytes are owned by the enclosing container and never
// dereferenced through PageLock.
unsafe impl Send for PageLock {}
unsafe impl Sync for PageLock {}

impl PageLock {
    fn acquire(ptr: *const u8, len: usize) -> Self {
        let active = len > 0 && sys::lock(ptr, len);
        Self { ptr, len, active }
    }

    const fn inactive() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            active: false,
        }
    }
}

impl Drop for PageLock {
    fn drop(&mut self) {
        if self.active {
            sys::unlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer — variable length
// ---------------------------------------------------------------------------

/// Variable-length secret byte buffer (plaintexts, derived keys).
///
/// Backed by [`SecretSlice`] from the `secrecy` crate, which zeroizes
/// on drop. Pages are `mlock`'d while the buffer lives.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    _lock: PageLock,
}

impl SecretBuffer {
    /// Copy `data` into a new secret buffer.
    ///
    /// The caller should zeroize the source afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SecureMemory`] if allocation fails.
    pub fn new(data: &[u8]) -> Result<Self, CryptoError> {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let lock = PageLock::acquire(exposed.as_ptr(), exposed.len());
        Ok(Self { inner, _lock: lock })
    }

    /// Create a buffer of `len` cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails.
    pub fn random(len: usize) -> Result<Self, CryptoError> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        let buf = Self::new(&bytes);
        bytes.zeroize();
        buf
    }

    /// Expose the raw bytes. Keep the borrow as short as possible.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// `true` when the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N> — fixed length
// ---------------------------------------------------------------------------

/// Fixed-length secret (keys, recovery entropy). Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    // The page lock unlocks on drop by itself; it must not be zeroized.
    #[zeroize(skip)]
    lock: PageLock,
}

impl<const N: usize> SecretBytes<N> {
    /// Take ownership of a fixed-size array.
    ///
    /// `mlock` is applied at the array's current address. Moving the
    /// value afterwards leaves a stale (harmless) lock: `munlock` on a
    /// stale address is a no-op and zeroization is unaffected.
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        let mut s = Self {
            bytes: data,
            lock: PageLock::inactive(),
        };
        s.lock = PageLock::acquire(s.bytes.as_ptr(), N);
        s
    }

    /// Fresh random secret from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; N];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        let s = Self::new(bytes);
        bytes.zeroize();
        Ok(s)
    }

    /// Copy from a slice of exactly `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] on a length mismatch.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; N];
        if data.len() != N {
            return Err(CryptoError::InvalidKeyMaterial(format!(
                "expected {N} bytes, got {}",
                data.len()
            )));
        }
        bytes.copy_from_slice(data);
        let s = Self::new(bytes);
        bytes.zeroize();
        Ok(s)
    }

    /// Expose the raw bytes for a cryptographic operation.
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Core dumps
// ---------------------------------------------------------------------------

/// Disable core dumps for the current process (RLIMIT_CORE = 0).
///
/// The key-custody worker calls this at startup so a crash never
/// writes the DEK to disk. No-op on non-Unix platforms.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if `setrlimit` fails.
pub fn disable_core_dumps() -> Result<(), CryptoError> {
    sys::disable_core_dumps()
}

// ---------------------------------------------------------------------------
// Platform syscalls
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod sys {
    use crate::error::CryptoError;

    pub(super) fn lock(ptr: *const u8, len: usize) -> bool {
        // SAFETY: mlock accepts any valid pointer/length pair; failure
        // is reported via the return code and treated as "not locked".
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn unlock(ptr: *const u8, len: usize) {
        // SAFETY: munlock failure is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }

    pub(super) fn disable_core_dumps() -> Result<(), CryptoError> {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with RLIMIT_CORE is a standard POSIX call.
        let ret = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) };
        if ret == 0 {
            Ok(())
        } else {
            Err(CryptoError::SecureMemory(
                "failed to set RLIMIT_CORE to 0".into(),
            ))
        }
    }
}

#[cfg(not(unix))]
mod sys {
    use crate::error::CryptoError;

    pub(super) fn lock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn unlock(_ptr: *const u8, _len: usize) {}

    pub(super) fn disable_core_dumps() -> Result<(), CryptoError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_buffer_holds_content() {
        let buf = SecretBuffer::new(b"key material").expect("allocation should succeed");
        assert_eq!(buf.expose(), b"key material");
        assert_eq!(buf.len(), 12);
        assert!(!buf.is_empty());
    }

    #[test]
    fn secret_buffer_empty() {
        let buf = SecretBuffer::new(b"").expect("allocation should succeed");
        assert!(buf.is_empty());
    }

    #[test]
    fn secret_buffer_random_is_unique() {
        let a = SecretBuffer::random(32).expect("random should succeed");
        let b = SecretBuffer::random(32).expect("random should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn secret_buffer_debug_is_masked() {
        let buf = SecretBuffer::new(b"hunter2").expect("allocation should succeed");
        assert_eq!(format!("{buf:?}"), "SecretBuffer(***)");
    }

    #[test]
    fn secret_bytes_roundtrip() {
        let key = SecretBytes::new([0xAB; 32]);
        assert_eq!(key.expose(), &[0xAB; 32]);
    }

    #[test]
    fn secret_bytes_from_slice_checks_length() {
        let ok = SecretBytes::<32>::from_slice(&[0x11; 32]);
        assert!(ok.is_ok());
        let err = SecretBytes::<32>::from_slice(&[0x11; 31]);
        assert!(matches!(err, Err(CryptoError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn secret_bytes_random_lengths() {
        let a = SecretBytes::<16>::random().expect("random should succeed");
        let b = SecretBytes::<32>::random().expect("random should succeed");
        assert_eq!(a.expose().len(), 16);
        assert_eq!(b.expose().len(), 32);
    }

    #[test]
    fn secret_bytes_debug_is_masked() {
        let key = SecretBytes::<32>::new([0xFF; 32]);
        assert_eq!(format!("{key:?}"), "SecretBytes<32>(***)");
    }

    #[cfg(unix)]
    #[test]
    fn disable_core_dumps_sets_rlimit() {
        disable_core_dumps().expect("disable_core_dumps should succeed");
        let mut limit = libc::rlimit {
            rlim_cur: 1,
            rlim_max: 1,
        };
        let ret = unsafe { libc::getrlimit(libc::RLIMIT_CORE, &raw mut limit) };
        assert_eq!(ret, 0);
        assert_eq!(limit.rlim_cur, 0);
    }
}
