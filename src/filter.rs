//! Selection of the descriptors that apply to a particular device.
//!
//! Every stage is a lazy, order preserving filter over borrowed descriptors; the catalog itself is
//! never modified. Stages compose in the order product type, modules, and, for mixer descriptors
//! only, the mixer index.

use crate::descriptor::{Applicability, EntityDescription};
use crate::product::{ConnectedModules, ProductType};

/// Keep descriptors that apply to all product types or list `product_type` explicitly.
pub fn by_product_type<'a, I>(
    product_type: ProductType,
    descriptions: I,
) -> impl Iterator<Item = &'a EntityDescription>
where
    I: IntoIterator<Item = &'a EntityDescription>,
{
    descriptions.into_iter().filter(move |d| d.product_types.contains(&product_type))
}

/// Keep descriptors without an owning module and those whose module is connected.
pub fn by_modules<'a, 'm, I>(
    modules: &'m ConnectedModules,
    descriptions: I,
) -> impl Iterator<Item = &'a EntityDescription> + 'm
where
    I: IntoIterator<Item = &'a EntityDescription>,
    I::IntoIter: 'm,
{
    descriptions.into_iter().filter(move |d| match d.module {
        None => true,
        Some(module) => modules.is_connected(module),
    })
}

/// Keep mixer descriptors applicable to the mixer at zero-based `index`.
///
/// Descriptors list one-based mixer numbers, hence the comparison is against `index + 1`.
pub fn by_index<'a, I>(index: u8, descriptions: I) -> impl Iterator<Item = &'a EntityDescription>
where
    I: IntoIterator<Item = &'a EntityDescription>,
{
    let number = u16::from(index) + 1;
    descriptions.into_iter().filter(move |d| match d.indexes {
        Applicability::All => true,
        Applicability::Only(indexes) => indexes.iter().any(|&i| u16::from(i) == number),
    })
}

/// The descriptors for entities of the controller itself.
pub fn top_level<'a, 'm>(
    product_type: ProductType,
    modules: &'m ConnectedModules,
    descriptions: &'a [EntityDescription],
) -> impl Iterator<Item = &'a EntityDescription> + 'm
where
    'a: 'm,
{
    by_modules(modules, by_product_type(product_type, descriptions))
}

/// The descriptors for entities of the mixer at zero-based `index`.
pub fn for_mixer<'a, 'm>(
    index: u8,
    product_type: ProductType,
    modules: &'m ConnectedModules,
    descriptions: &'a [EntityDescription],
) -> impl Iterator<Item = &'a EntityDescription> + 'm
where
    'a: 'm,
{
    by_index(index, top_level(product_type, modules, descriptions))
}
