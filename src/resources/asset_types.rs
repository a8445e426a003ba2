// Copyright 2024 Saptak Santra
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

//! Raw file-backed resource types.
//!
//! These hold the undecoded file contents; the rendering and audio backends
//! turn them into GPU textures, compiled effects and playable sounds.

use crate::resources::Asset;

/// Implemented by resources that are a thin wrapper over a file's bytes
pub trait RawResource: Asset + Sized {
    fn from_bytes(path: String, data: Vec<u8>) -> Self;

    fn replace_data(&mut self, data: Vec<u8>);

    fn data(&self) -> &[u8];
}

macro_rules! raw_resource {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            path: String,
            data: Vec<u8>,
        }

        impl $name {
            pub fn new(path: String, data: Vec<u8>) -> Self {
                Self { path, data }
            }

            pub fn path(&self) -> &str {
                &self.path
            }

            pub fn is_valid(&self) -> bool {
                !self.data.is_empty()
            }
        }

        impl Asset for $name {
            fn memory_size(&self) -> usize {
                self.data.len()
            }

            fn on_unload(&mut self) {
                self.data = Vec::new();
            }
        }

        impl RawResource for $name {
            fn from_bytes(path: String, data: Vec<u8>) -> Self {
                Self::new(path, data)
            }

            fn replace_data(&mut self, data: Vec<u8>) {
                self.data = data;
            }

            fn data(&self) -> &[u8] {
                &self.data
            }
        }
    };
}

raw_resource!(
    /// Texture file contents
    TextureResource
);

raw_resource!(
    /// Compiled effect (shader) file contents
    EffectResource
);

raw_resource!(
    /// Sound effect file contents
    SoundResource
);
