//! Semantic class registry: names, aliases and display colors.

use std::collections::HashMap;

use crate::error::RegistryError;

/// Integer id of a semantic class, an index into the registry.
pub type ClassId = usize;

/// Immutable mapping between class names, class ids and display colors.
///
/// Several raw category names can share one id through aliases, e.g. KITTI
/// `Van` is folded into `Car`. Colors are stored in BGR channel order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRegistry {
    names: Vec<String>,
    aliases: HashMap<String, ClassId>,
    colors: Vec<[u8; 3]>,
}

impl ClassRegistry {
    /// Create a registry.
    ///
    /// # Arguments
    ///
    /// * `names` - Canonical class names; the index of a name is its id.
    /// * `aliases` - Extra names and the id they resolve to.
    /// * `colors` - One BGR color per canonical class.
    ///
    /// Canonical names always resolve to their own id; an alias with the same
    /// spelling as a canonical name is overridden by it.
    pub fn new(
        names: Vec<String>,
        aliases: HashMap<String, ClassId>,
        colors: Vec<[u8; 3]>,
    ) -> Result<Self, RegistryError> {
        if colors.len() != names.len() {
            return Err(RegistryError::ColorCountMismatch {
                names: names.len(),
                colors: colors.len(),
            });
        }

        let mut lookup = HashMap::with_capacity(aliases.len() + names.len());
        for (alias, id) in aliases {
            if id >= names.len() {
                return Err(RegistryError::AliasOutOfRange {
                    alias,
                    id,
                    len: names.len(),
                });
            }
            lookup.insert(alias, id);
        }
        for (id, name) in names.iter().enumerate() {
            if let Some(previous) = lookup.insert(name.clone(), id) {
                if previous != id {
                    log::warn!("alias {name} -> {previous} shadowed by canonical class {id}");
                }
            }
        }

        log::debug!("class registry with {} classes, {} names", names.len(), lookup.len());

        Ok(Self {
            names,
            aliases: lookup,
            colors,
        })
    }

    /// The KITTI classes used for detection: `Car`, `Pedestrian`, `Cyclist`.
    pub fn kitti() -> Self {
        let names = vec!["Car".to_string(), "Pedestrian".to_string(), "Cyclist".to_string()];
        let aliases = HashMap::from([
            ("Car".to_string(), 0),
            ("Pedestrian".to_string(), 1),
            ("Cyclist".to_string(), 2),
            ("Van".to_string(), 0),
            ("Person_sitting".to_string(), 1),
        ]);
        let colors = vec![[0, 255, 255], [0, 0, 255], [255, 0, 0]];
        Self {
            names,
            aliases,
            colors,
        }
    }

    /// Number of canonical classes.
    pub fn num_classes(&self) -> usize {
        self.names.len()
    }

    /// Canonical class names ordered by id.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolve a canonical or alias name to its class id.
    pub fn id_for_name(&self, name: &str) -> Option<ClassId> {
        self.aliases.get(name).copied()
    }

    /// Canonical name of a class id.
    pub fn name_for_id(&self, id: ClassId) -> Result<&str, RegistryError> {
        self.names
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| self.out_of_range(id))
    }

    /// Display color of a class id, in BGR order.
    ///
    /// # Errors
    ///
    /// [`RegistryError::IndexOutOfRange`] if `id` is not a class of this
    /// registry, which points to a mismatched class count upstream.
    pub fn color_for_id(&self, id: ClassId) -> Result<[u8; 3], RegistryError> {
        self.colors
            .get(id)
            .copied()
            .ok_or_else(|| self.out_of_range(id))
    }

    fn out_of_range(&self, id: ClassId) -> RegistryError {
        log::error!(
            "class id {id} is out of range for a registry with {} classes",
            self.names.len()
        );
        RegistryError::IndexOutOfRange {
            id,
            len: self.names.len(),
        }
    }
}
