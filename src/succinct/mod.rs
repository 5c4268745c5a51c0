/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Succinct data structures: a packed bit array, rank/select bit sequences
//! over it, a Huffman-shaped wavelet tree, an Elias–Fano sorted integer
//! list, and a k²-tree over sparse binary matrices.

mod bit_array;
pub use bit_array::BitArray;

mod bitsequence;
pub use bitsequence::{Bitsequence, BitsequenceParams};

mod elias_fano;
pub use elias_fano::EliasFano;

mod k2_tree;
pub use k2_tree::K2Tree;

mod wavelet_tree;
pub use wavelet_tree::WaveletTree;
