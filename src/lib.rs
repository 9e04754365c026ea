// ==============================================================================
// lib.rs - Sequencing Run Setup Core Library
// ==============================================================================
// Description: Library interface for override cycles, index analysis and
//              sample sheet generation
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================

pub mod chemistry;
pub mod override_cycles;
pub mod models;
pub mod cycle_engine;
pub mod collisions;
pub mod color_balance;
pub mod validator;
pub mod samplesheet;
pub mod samplesheet_v1;
pub mod output;
pub mod processor;
