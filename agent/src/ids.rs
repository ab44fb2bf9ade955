// Copyright 2019-2021 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::hash::Hasher;

use fnv::FnvHasher;

/// Deterministic broker `clientId`, derived from a stable hash of
/// `domain + agent` so reconnects reuse the same durable session.
pub fn derive_client_id(domain: &str, agent: &str) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(domain.as_bytes());
    hasher.write(&[0]);
    hasher.write(agent.as_bytes());
    let hash = hasher.finish();
    format!("vrpca{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic_and_prefixed() {
        let a = derive_client_id("domain", "agent1");
        let b = derive_client_id("domain", "agent1");
        assert_eq!(a, b);
        assert!(a.starts_with("vrpca"));
    }

    #[test]
    fn distinguishes_domain_agent_boundary() {
        // "domain"+"1agent" must not collide with "domain1"+"agent" despite
        // concatenating to the same bytes.
        let a = derive_client_id("domain", "1agent");
        let b = derive_client_id("domain1", "agent");
        assert_ne!(a, b);
    }
}
