use bitflags::bitflags;
use rapier2d::prelude::{Group, InteractionGroups};

bitflags! {
    /// Collision category/mask bits shared by every fixture. A contact is only
    /// reported when each side's category intersects the other side's mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Category: u32 {
        const GROUND = 1 << 0;
        const PLATFORM = 1 << 1;
        const WALL = 1 << 2;
        const FEET = 1 << 3;
        const INTERACTABLE_OBJECT = 1 << 4;
        const CHARACTER_BODY = 1 << 5;
        const WEAPON = 1 << 6;
        const PROJECTILE = 1 << 7;
    }
}

impl Category {
    pub const TERRAIN: Category =
        Category::GROUND.union(Category::PLATFORM).union(Category::WALL);

    pub fn interaction_groups(self, mask: Category) -> InteractionGroups {
        InteractionGroups::new(Group::from_bits_truncate(self.bits()), Group::from_bits_truncate(mask.bits()))
    }

    pub fn is_walkable(self) -> bool {
        self.intersects(Category::GROUND | Category::PLATFORM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feet_and_ground_interact_only_when_both_masks_agree() {
        let feet_mask = Category::GROUND | Category::PLATFORM | Category::INTERACTABLE_OBJECT;
        let ground_mask = Category::all();
        let feet = Category::FEET.interaction_groups(feet_mask);
        assert!(feet.test(Category::GROUND.interaction_groups(ground_mask)));
        assert!(!feet.test(Category::WALL.interaction_groups(ground_mask)));
        assert!(!feet.test(Category::GROUND.interaction_groups(Category::CHARACTER_BODY)));
    }

    #[test]
    fn walkable_covers_ground_and_platform() {
        assert!(Category::GROUND.is_walkable());
        assert!(Category::PLATFORM.is_walkable());
        assert!(!Category::WALL.is_walkable());
        assert!(Category::TERRAIN.contains(Category::WALL));
    }
}
