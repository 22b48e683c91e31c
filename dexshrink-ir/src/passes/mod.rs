pub mod class_initializer_side_effects;
