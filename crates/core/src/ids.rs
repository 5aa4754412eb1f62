// SPDX-License-Identifier: MIT

//! Concrete entity identifiers, all backed by [`crate::id::IdBuf`].

crate::define_id! {
    /// Identifies a deployed agent (stable across re-deploys).
    pub struct AgentId("agt-");
}

crate::define_id! {
    /// Identifies a logical session (conversation), independent of any sandbox.
    pub struct SessionId("ses-");
}

crate::define_id! {
    /// Identifies a sandbox process + workspace.
    pub struct SandboxId("sbx-");
}

crate::define_id! {
    /// Identifies a runner host in the fleet.
    pub struct RunnerId("run-");
}

crate::define_id! {
    /// Identifies a tenant (API-key scoped namespace).
    pub struct TenantId("tnt-");
}

/// Sentinel `runnerId` used by the coordinator to mean "this host's local
/// backend", distinct from `None` which callers sometimes use for the same
/// purpose; kept so DB rows can store a non-null value when desired.
pub const LOCAL_RUNNER_SENTINEL: &str = "__local__";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_types_have_distinct_prefixes() {
        assert_eq!(AgentId::new().as_str().as_bytes()[..4], *b"agt-");
        assert_eq!(SessionId::new().as_str().as_bytes()[..4], *b"ses-");
        assert_eq!(SandboxId::new().as_str().as_bytes()[..4], *b"sbx-");
        assert_eq!(RunnerId::new().as_str().as_bytes()[..4], *b"run-");
        assert_eq!(TenantId::new().as_str().as_bytes()[..4], *b"tnt-");
    }
}
