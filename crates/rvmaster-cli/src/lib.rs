// Copyright 2025 RVMaster Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # RVMaster CLI
//!
//! Command-line interface for querying the master.
//!
//! The binary parses its flags with `argh`, resolves the master the same way
//! library users do (`--master` acts as the `__master` override, otherwise
//! `REAL_MASTER_URI`), and runs the blocking client on tokio's blocking pool
//! so Ctrl-C can raise the shutdown signal while a call waits.
//!
//! ## Key Commands
//!
//! - `rvmaster check`: exit status tells whether the master answers
//! - `rvmaster topics`: published topics, one `name type` line each
//! - `rvmaster nodes`: live node names, sorted
//! - `rvmaster call`: any master method, payload printed as raw JSON

pub mod output;
