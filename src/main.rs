use std::path::PathBuf;

use rtstruct_mask::{
    converter::{ConversionOptions, MaskConverter},
    loader::{ImageLoader, StructureSetLoader},
};

fn main() {
    let image = ImageLoader::load_from_directory(PathBuf::from("dicom"))
        .expect("should have loaded image geometry from directory");
    let structure_set = StructureSetLoader::load_from_file(PathBuf::from("rtstruct.dcm"))
        .expect("should have loaded structure set");
    let masks = MaskConverter::convert(&structure_set, Some(&image), &ConversionOptions::default())
        .expect("should have converted structure set");

    for mask in &masks {
        let center = mask.dim().0 / 2;
        let image = mask
            .slice_to_image(center)
            .expect("should have returned image at center of mask");
        image
            .save(format!("{}.png", mask.roi_name()))
            .expect("should have saved mask slice");
    }
}
