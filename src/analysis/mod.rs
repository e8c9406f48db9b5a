pub mod copy_move;
pub mod ela;
pub mod homography;
pub mod keypoints;
pub mod noise;
