//! Dataset loaders. Both decode everything up front into an in-memory
//! [`Dataset`](crate::dataset::Dataset); failures surface as
//! `HarnessError::Load` before any timed run starts.

pub mod cifar;
pub mod image_folder;

pub use cifar::{load_cifar10, load_cifar10_file, CIFAR10_SHAPE};
pub use image_folder::{load_image_folder, TINY_IMAGENET_SHAPE};
