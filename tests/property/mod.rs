// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Graph invariants checked over generated stack configurations.

mod graph_properties;
