// This is my own float trait versus the num_traits' one:

pub trait Float: num_traits::Float + num_traits::Bounded {
    const PI: Self;
    const INV_2PI: Self;
    const SQRT_2: Self;

    // These could be constants, but to mimick the design of num_traits' float
    // we'll make them functions:
    fn two() -> Self;
    fn half() -> Self;
}

impl Float for f32 {
    const PI: Self = 3.14159265358979323846;
    const INV_2PI: Self = 0.15915494309189533577;
    const SQRT_2: Self = 1.41421356237309504880;

    fn two() -> Self {
        2f32
    }

    fn half() -> Self {
        0.5f32
    }
}

impl Float for f64 {
    const PI: Self = 3.14159265358979323846;
    const INV_2PI: Self = 0.15915494309189533577;
    const SQRT_2: Self = 1.41421356237309504880;

    fn two() -> Self {
        2.
    }

    fn half() -> Self {
        0.5
    }
}
