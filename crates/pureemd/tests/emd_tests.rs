//! End-to-end behaviour of `EmdFile` against files on disk.

use ndarray::{array, Array3, ArrayD, IxDyn};
use pretty_assertions::assert_eq;
use pureemd::{
    default_dims, AttrValue, Container, ContainerFile, DimVector, EmdArray, EmdFile, Error,
    Layout, MetadataGroup, Mode, OpenOptions, StoreError, Version,
};

fn scratch(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

fn cube() -> (EmdArray, Vec<DimVector>) {
    let data: EmdArray = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f64)
        .into();
    let dims = vec![
        DimVector::new(array![0.0, 1.5], "z", "nm"),
        DimVector::new(array![0.0, 0.1, 0.2], "y", "Å"),
        DimVector::new(array![-2i16, -1, 0, 1], "x", "px"),
    ];
    (data, dims)
}

#[test]
fn round_trip_through_disk() {
    let (_dir, path) = scratch("round_trip.emd");
    let (data, dims) = cube();
    {
        let mut f = EmdFile::open_rw(&path).unwrap();
        let g = f.write("cube", &data, &dims, None, false).unwrap();
        assert_eq!(g.path(), "/data/cube");
        f.close().unwrap();
    }

    let f = EmdFile::open(&path).unwrap();
    assert!(!f.is_writable());
    assert_eq!(f.groups().len(), 1);
    let read = f.read_index(0).unwrap();
    assert_eq!(read.data, data);
    assert_eq!(read.dims, dims);
}

#[test]
fn fresh_file_gets_version_0_2() {
    let (_dir, path) = scratch("fresh.emd");
    let f = EmdFile::open_rw(&path).unwrap();
    assert_eq!(f.version(), Version::new(0, 2));
    assert_eq!(f.layout(), Layout::V02);
    f.close().unwrap();

    let c = ContainerFile::open(&path, Mode::ReadOnly).unwrap();
    assert_eq!(c.attr("/", "version_major").unwrap(), Some(AttrValue::I64(0)));
    assert_eq!(c.attr("/", "version_minor").unwrap(), Some(AttrValue::I64(2)));
    assert_eq!(
        c.children("/").unwrap(),
        vec!["comments", "data", "microscope", "sample", "user"]
    );
}

#[test]
fn missing_file_is_an_open_error() {
    let (_dir, path) = scratch("absent.emd");
    let err = EmdFile::open(&path).unwrap_err();
    match err {
        Error::Open { path: p, source } => {
            assert!(p.ends_with("absent.emd"));
            assert!(matches!(source, StoreError::Io(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn comments_append_in_call_order() {
    let (_dir, path) = scratch("comments.emd");
    let mut f = EmdFile::open_rw(&path).unwrap();
    f.put_comment("one", Some("2024-05-01 12:00:00 (UTC)")).unwrap();
    f.put_comment("fresh", Some("2024-05-02 12:00:00 (UTC)")).unwrap();
    f.put_comment("two", Some("2024-05-01 12:00:00 (UTC)")).unwrap();
    f.close().unwrap();

    let f = EmdFile::open(&path).unwrap();
    let comments = f.comments().unwrap();
    assert_eq!(
        comments.into_iter().collect::<Vec<_>>(),
        vec![
            ("2024-05-01 12:00:00 (UTC)".to_string(), "one\ntwo".to_string()),
            ("2024-05-02 12:00:00 (UTC)".to_string(), "fresh".to_string()),
        ]
    );
}

#[test]
fn read_only_file_refuses_mutation() {
    let (_dir, path) = scratch("ro.emd");
    EmdFile::open_rw(&path).unwrap().close().unwrap();
    let before = std::fs::read(&path).unwrap();

    let mut f = EmdFile::open(&path).unwrap();
    let (data, dims) = cube();
    assert!(matches!(
        f.write("x", &data, &dims, None, false),
        Err(Error::ReadOnly)
    ));
    assert!(matches!(f.put_comment("x", None), Err(Error::ReadOnly)));
    assert!(matches!(
        f.set_metadata(MetadataGroup::Sample, "k", 1i64),
        Err(Error::ReadOnly)
    ));
    f.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn read_only_open_does_not_bootstrap() {
    let (_dir, path) = scratch("bare.emd");
    ContainerFile::open(&path, Mode::ReadWrite)
        .unwrap()
        .close()
        .unwrap();

    let f = EmdFile::open(&path).unwrap();
    assert_eq!(f.version(), Version::V0_2);
    assert_eq!(f.detected_version(), None);
    assert!(f.container().children("/").unwrap().is_empty());
}

#[test]
fn malformed_dims_leave_file_unchanged() {
    let (_dir, path) = scratch("shape.emd");
    let mut f = EmdFile::open_rw(&path).unwrap();
    f.flush().unwrap();
    let before = f.container().to_bytes().unwrap();
    let (data, dims) = cube();

    let mut short = dims.clone();
    short[2] = DimVector::new(array![0i16, 1, 2], "x", "px");
    for bad in [&dims[..2], &short[..]] {
        assert!(matches!(
            f.write("x", &data, bad, None, false),
            Err(Error::ShapeMismatch(_))
        ));
        assert_eq!(f.container().to_bytes().unwrap(), before);
    }
    assert!(f.groups().is_empty());
}

#[test]
fn overwrite_semantics() {
    let (_dir, path) = scratch("overwrite.emd");
    let mut f = EmdFile::open_rw(&path).unwrap();
    let (data, dims) = cube();
    f.write("x", &data, &dims, None, false).unwrap();

    let small: EmdArray = array![[1u8, 2], [3, 4]].into();
    let small_dims = default_dims(&small, Some(&[0.5, 2.0])).unwrap();
    let err = f.write("x", &small, &small_dims, None, false).unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }));
    assert_eq!(f.read_index(0).unwrap().data, data);

    f.write("x", &small, &small_dims, None, true).unwrap();
    assert_eq!(f.groups().len(), 1);
    let read = f.read_index(0).unwrap();
    assert_eq!(read.data, small);
    assert_eq!(read.dims, small_dims);
    assert_eq!(f.container().kind("/data/x/dim3").unwrap(), None);
}

#[test]
fn discovery_finds_nested_groups() {
    let (_dir, path) = scratch("nested.emd");
    let mut f = EmdFile::open_rw(&path).unwrap();
    let data: EmdArray = array![1.0f32, 2.0].into();
    let dims = default_dims(&data, None).unwrap();

    f.container_mut().create_group("/a").unwrap();
    f.container_mut().create_group("/a/b").unwrap();
    f.container_mut().create_group("/a/b/c").unwrap();
    f.write("top", &data, &dims, Some("/"), false).unwrap();
    f.write("one", &data, &dims, Some("/a"), false).unwrap();
    f.write("three", &data, &dims, Some("/a/b/c"), false).unwrap();
    f.close().unwrap();

    let f = EmdFile::open(&path).unwrap();
    let found: Vec<&str> = f.groups().iter().map(|g| g.path()).collect();
    assert_eq!(found, vec!["/a/b/c/three", "/a/one", "/top"]);
}

#[test]
fn refresh_picks_up_direct_changes() {
    let mut f = EmdFile::from_container(ContainerFile::in_memory()).unwrap();
    f.container_mut().create_group("/data/manual").unwrap();
    f.container_mut()
        .set_attr("/data/manual", "emd_group_type", AttrValue::U64(1))
        .unwrap();
    assert!(f.groups().is_empty());
    assert_eq!(f.refresh().unwrap().len(), 1);
    assert_eq!(f.group(0).unwrap().name(), "manual");
}

#[test]
fn v05_layout_and_alternate_root() {
    let (_dir, path) = scratch("py4dstem.emd");
    {
        let mut c = ContainerFile::open(&path, Mode::ReadWrite).unwrap();
        for g in [
            "/4DSTEM_experiment",
            "/4DSTEM_experiment/data",
            "/4DSTEM_experiment/data/datacubes",
        ] {
            c.create_group(g).unwrap();
        }
        c.set_attr("/4DSTEM_experiment", "version_major", AttrValue::I64(0))
            .unwrap();
        c.set_attr("/4DSTEM_experiment", "version_minor", AttrValue::I64(5))
            .unwrap();
        c.close().unwrap();
    }

    let mut f = EmdFile::open_rw(&path).unwrap();
    assert_eq!(f.version(), Version::V0_5);
    assert_eq!(f.layout(), Layout::V05);

    let data: EmdArray = ArrayD::<u16>::zeros(IxDyn(&[2, 2, 3, 3])).into();
    let dims = default_dims(&data, None).unwrap();
    let g = f
        .write(
            "dc",
            &data,
            &dims,
            Some("/4DSTEM_experiment/data/datacubes"),
            false,
        )
        .unwrap();
    assert_eq!(
        f.container().kind("/4DSTEM_experiment/data/datacubes/dc/datacube").unwrap(),
        Some(pureemd::NodeKind::Dataset)
    );
    assert_eq!(f.read(&g).unwrap().data, data);

    // A v0.5 file has no dataset name for groups outside the collections.
    assert!(matches!(
        f.write("plain", &data, &dims, None, false),
        Err(Error::UnsupportedLayout(_))
    ));
    // The alternate root's version is not copied to the root.
    assert_eq!(f.container().attr("/", "version_major").unwrap(), None);
}

#[test]
fn same_group_under_v02_uses_data() {
    let (_dir, path) = scratch("v02_datacubes.emd");
    let mut f = EmdFile::open_rw(&path).unwrap();
    f.container_mut().create_group("/data/datacubes").unwrap();
    let data: EmdArray = array![[1i32, 2], [3, 4]].into();
    let dims = default_dims(&data, None).unwrap();
    f.write("dc", &data, &dims, Some("/data/datacubes"), false)
        .unwrap();
    assert_eq!(
        f.container().kind("/data/datacubes/dc/data").unwrap(),
        Some(pureemd::NodeKind::Dataset)
    );
}

#[test]
fn legacy_array_form_labels() {
    let (_dir, path) = scratch("labels.emd");
    let mut f = EmdFile::open_rw(&path).unwrap();
    let (data, dims) = cube();
    f.write("x", &data, &dims, None, false).unwrap();
    f.container_mut()
        .set_attr(
            "/data/x/dim1",
            "name",
            AttrValue::BytesArray(vec![b"depth\0".to_vec()]),
        )
        .unwrap();
    f.container_mut()
        .set_attr("/data/x/dim3", "units", AttrValue::StringArray(vec!["pixel".into()]))
        .unwrap();
    let read = f.read_index(0).unwrap();
    assert_eq!(read.dims[0].name, "depth");
    assert_eq!(read.dims[2].units, "pixel");
}

#[test]
fn lazy_read_matches_eager_read() {
    let (_dir, path) = scratch("lazy.emd");
    let (data, dims) = cube();
    {
        let mut f = EmdFile::open_rw(&path).unwrap();
        f.write("x", &data, &dims, None, false).unwrap();
    }

    let f = EmdFile::with_options(&path, OpenOptions::new().mmap(true)).unwrap();
    let lazy = f.read_lazy_index(0).unwrap();
    assert_eq!(lazy.data.shape(), &[2, 3, 4]);
    assert_eq!(lazy.data.dtype(), pureemd::DType::F64);
    assert_eq!(lazy.data.path(), "/data/x/data");
    assert_eq!(lazy.data.bytes().unwrap().len(), 24 * 8);
    assert_eq!(lazy.data.load().unwrap(), data);
    assert_eq!(lazy.dims, dims);

    assert!(matches!(
        f.read_lazy_index(5),
        Err(Error::NoSuchGroup { index: 5, count: 1 })
    ));
}

#[test]
fn default_dims_validation() {
    let data: EmdArray = ArrayD::<f32>::zeros(IxDyn(&[3, 4, 5])).into();
    let dims = default_dims(&data, Some(&[1.0, 2.0, 3.0])).unwrap();
    assert_eq!(
        dims.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        vec!["dim1", "dim2", "dim3"]
    );
    assert!(matches!(
        default_dims(&data, Some(&[1.0, 2.0])),
        Err(Error::ShapeMismatch(_))
    ));
}

#[test]
fn read_of_non_emd_group_is_type_mismatch() {
    let f = EmdFile::from_container(ContainerFile::in_memory()).unwrap();
    let g = pureemd::EmdGroup::new("/microscope").unwrap();
    assert!(matches!(f.read(&g), Err(Error::TypeMismatch(_))));
}
