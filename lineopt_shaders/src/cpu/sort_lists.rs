// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT OR Unlicense

use lineopt_encoding::{ConfigUniform, Fragment, FragmentLowRes, INVALID_INDEX};

use super::CpuBinding;

trait ListNode {
    fn depth(&self) -> u32;
    fn next(&self) -> u32;
    fn set_next(&mut self, next: u32);
}

impl ListNode for Fragment {
    fn depth(&self) -> u32 {
        self.depth
    }
    fn next(&self) -> u32 {
        self.next
    }
    fn set_next(&mut self, next: u32) {
        self.next = next;
    }
}

impl ListNode for FragmentLowRes {
    fn depth(&self) -> u32 {
        self.depth
    }
    fn next(&self) -> u32 {
        self.next
    }
    fn set_next(&mut self, next: u32) {
        self.next = next;
    }
}

// Stable insertion sort by relinking, returns the new head.
fn sort_list<T: ListNode>(head: u32, pool: &mut [T]) -> u32 {
    let mut sorted = INVALID_INDEX;
    let mut ix = head;
    while ix != INVALID_INDEX {
        let next = pool[ix as usize].next();
        let depth = pool[ix as usize].depth();
        if sorted == INVALID_INDEX || pool[sorted as usize].depth() > depth {
            pool[ix as usize].set_next(sorted);
            sorted = ix;
        } else {
            // Insert after the last fragment that is not farther away.
            let mut prev = sorted;
            loop {
                let candidate = pool[prev as usize].next();
                if candidate == INVALID_INDEX || pool[candidate as usize].depth() > depth {
                    break;
                }
                prev = candidate;
            }
            let after = pool[prev as usize].next();
            pool[ix as usize].set_next(after);
            pool[prev as usize].set_next(ix);
        }
        ix = next;
    }
    sorted
}

pub fn sort_lists_low_main(config: &ConfigUniform, heads: &mut [u32], pool: &mut [FragmentLowRes]) {
    let n_pixels = (config.low_width * config.low_height) as usize;
    for pixel_ix in 0..n_pixels.min(heads.len()) {
        heads[pixel_ix] = sort_list(heads[pixel_ix], pool);
    }
}

pub fn sort_lists_main(config: &ConfigUniform, heads: &mut [u32], pool: &mut [Fragment]) {
    let n_pixels = (config.width * config.height) as usize;
    for pixel_ix in 0..n_pixels.min(heads.len()) {
        let sorted = sort_list(heads[pixel_ix], pool);
        heads[pixel_ix] = sorted;
        let mut transmittance = 1.0;
        let mut ix = sorted;
        while ix != INVALID_INDEX {
            let frag = &mut pool[ix as usize];
            frag.transmittance = transmittance;
            transmittance *= 1.0 - frag.transparency;
            ix = frag.next;
        }
    }
}

pub fn sort_lists_low(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let mut heads = resources[1].slice_mut();
    let mut pool = resources[2].slice_mut();
    sort_lists_low_main(&config, &mut heads, &mut pool);
}

pub fn sort_lists(_n_wg: u32, resources: &[CpuBinding<'_>]) {
    let config = resources[0].uniform();
    let mut heads = resources[1].slice_mut();
    let mut pool = resources[2].slice_mut();
    sort_lists_main(&config, &mut heads, &mut pool);
}
