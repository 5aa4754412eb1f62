// SPDX-License-Identifier: MIT

//! `RunnerBackend` (§4.6/§4.7): the uniform seam the router and coordinator
//! use over local and remote sandbox hosts, plus the two implementations
//! of it.

mod error;
mod frame;
mod local;
mod remote;
mod trait_def;

pub use error::BackendError;
pub use frame::{
    CreateSandboxRequestDto, InterruptRequest, MarkRequest, MarkState, PersistRequest, PersistResponse,
    SandboxHandleDto, SseFrame,
};
pub use local::LocalRunnerBackend;
pub use remote::RemoteRunnerBackend;
pub use trait_def::{RunnerBackend, SandboxHandle};
