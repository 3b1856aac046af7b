use std::collections::HashSet;
use std::sync::Mutex;

use zi::cache::SignatureVerifier;
use zi::errors::Error;

/// Passes signed data through unchanged unless the uri has been told to
/// fail, since real signature/trust verification is out of scope
/// (spec.md §1) and the only thing worth exercising here is "what
/// happens when verification fails" (spec.md §7).
#[derive(Default)]
pub struct FakeSignatureVerifier {
    reject: Mutex<HashSet<String>>,
}

impl FakeSignatureVerifier {
    pub fn new() -> Self {
        FakeSignatureVerifier::default()
    }

    pub fn reject(&self, uri: &str) {
        self.reject.lock().expect("fake verifier poisoned").insert(uri.to_string());
    }
}

impl SignatureVerifier for FakeSignatureVerifier {
    fn verify(&self, uri: &str, signed_data: &[u8]) -> Result<Vec<u8>, Error> {
        if self.reject.lock().expect("fake verifier poisoned").contains(uri) {
            return Err(Error::SafeException(format!("signature rejected for {uri}")));
        }
        Ok(signed_data.to_vec())
    }
}
