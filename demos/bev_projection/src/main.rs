use argh::FromArgs;
use std::path::PathBuf;

use kornia_bev::boxes::{project_box, Box3d};
use kornia_bev::SensorConfig;

#[derive(FromArgs)]
/// Project a LiDAR point into the image and the bird's-eye-view grid
struct Args {
    /// path to a JSON sensor configuration, defaults to KITTI
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// x coordinate of the point in the LiDAR frame
    #[argh(option, short = 'x', default = "10.0")]
    x: f64,

    /// y coordinate of the point in the LiDAR frame
    #[argh(option, short = 'y', default = "1.0")]
    y: f64,

    /// z coordinate of the point in the LiDAR frame
    #[argh(option, short = 'z', default = "-1.0")]
    z: f64,

    /// class name of the detection drawn around the point
    #[argh(option, default = "String::from(\"Car\")")]
    class: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => SensorConfig::from_path(path)?,
        None => SensorConfig::default(),
    };
    let setup = config.build()?;

    let point = [args.x, args.y, args.z];
    let calib = &setup.calibration;

    let rectified = calib.rectify(&calib.velo_to_cam(&point));
    println!("LiDAR point {point:?} -> rectified camera {rectified:?}");

    match calib.project(&rectified) {
        Ok(pixel) if rectified[2] > 0.0 => {
            println!("image pixel: {pixel:?}");
            let back = calib.image_to_velo_approx(&pixel, Some(rectified[2]))?;
            println!("back to LiDAR with known depth: {back:?}");
        }
        Ok(_) => println!("the point is behind the camera"),
        Err(e) => log::warn!("cannot project {point:?}: {e}"),
    }

    match setup.regions.to_cell(&point) {
        Some((region, row, col)) => println!("{region:?} grid cell: ({row}, {col})"),
        None => println!("the point is outside both grids"),
    }

    let Some(class_id) = setup.classes.id_for_name(&args.class) else {
        log::warn!("unknown class {}", args.class);
        return Ok(());
    };
    let color = setup.classes.color_for_id(class_id)?;

    // a car-sized box standing on the projected point
    let bbox = Box3d {
        h: 1.5,
        w: 1.6,
        l: 3.9,
        x: rectified[0],
        y: rectified[1],
        z: rectified[2],
        ry: 0.0,
    };
    match project_box(calib, &bbox) {
        Ok(corners) => println!("{} box (bgr {color:?}) corners: {corners:?}", args.class),
        Err(e) => log::warn!("cannot draw the box: {e}"),
    }

    Ok(())
}
