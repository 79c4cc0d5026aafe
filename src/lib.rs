// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod config;
pub mod constants;
pub mod error;
pub mod kubernetes;
pub mod patch;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod structures;
pub mod wait;

#[cfg(test)]
pub mod test_utils;
