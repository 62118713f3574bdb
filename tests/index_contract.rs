use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use specgeom::spectrum_index::general::GeneralIndex;
use specgeom::{ErrorKind, IndexEntry, SpecGeomError, SpectrumDetectorIndex};

#[test]
fn contiguous_range_zero_to_four() {
    let index = SpectrumDetectorIndex::range(0, 4).unwrap();
    assert_eq!(index.element_count(), 5);
    assert_eq!(index.spectrum_count(), 5);
    assert_eq!(index.ndet(2), Ok(1));
    assert_eq!(index.detectors(2).unwrap().to_vec(), vec![2]);
    assert_eq!(
        index.spectra(&[5]),
        Err(SpecGeomError::OutOfRange {
            value: 5,
            start: 0,
            end: 4
        })
    );

    let mut cursor = index.cursor();
    let mut seen = Vec::new();
    while let Some(entry) = cursor.current() {
        seen.push(entry);
        cursor.advance();
    }
    assert_eq!(
        seen,
        (0..=4).map(|i| IndexEntry::new(i, i)).collect_vec()
    );
    assert!(cursor.at_end());
    cursor.advance();
    assert!(cursor.at_end());
}

#[test]
fn general_populate_and_remap() {
    let mut general = GeneralIndex::from_pairs(&[1, 1, 2], &[10, 11, 20]).unwrap();
    {
        let index = SpectrumDetectorIndex::from(general.clone());
        assert_eq!(index.spectrum_count(), 2);
        assert_eq!(index.ndet(1), Ok(2));
        assert_eq!(index.ndet(2), Ok(1));
        let mut dets = index.detectors(1).unwrap().to_vec();
        dets.sort_unstable();
        assert_eq!(dets, vec![10, 11]);
    }

    general.remap(1, 2).unwrap();
    let index = SpectrumDetectorIndex::from(general);
    assert_eq!(index.ndet(2), Ok(3));
    assert_eq!(index.ndet(1).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(index.element_count(), 3);
}

#[test]
fn detectors_are_stable_across_calls() {
    let index =
        SpectrumDetectorIndex::from_pairs(&[3, 3, 3, 3], &[40, 10, 30, 20]).unwrap();
    let first = index.detectors(3).unwrap();
    for _ in 0..10 {
        assert_eq!(index.detectors(3).unwrap(), first);
    }
}

#[test]
fn every_inserted_detector_maps_back() {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let n = 2_000;
    let detectors = (0..n).collect_vec();
    let spectra = (0..n).map(|_| rng.random_range(-50..50)).collect_vec();
    let index = SpectrumDetectorIndex::from_pairs(&spectra, &detectors).unwrap();

    assert_eq!(index.element_count(), n as usize);
    assert_eq!(
        index.spectrum_count(),
        spectra.iter().unique().count()
    );

    for &d in &detectors {
        let s = index.spectra(&[d]).unwrap()[0];
        assert!(index.ndet(s).unwrap() >= 1);
        assert!(index.detectors(s).unwrap().contains(&d));
    }

    // every detector has one owner here, so detectors map back to their spectrum
    for entry in index.entries() {
        let dets = index.detectors(entry.spectrum).unwrap();
        assert!(index.spectra(&dets).unwrap().iter().all(|s| *s == entry.spectrum));
    }
}

#[test]
fn cursor_visits_each_spectrum_once() {
    let index =
        SpectrumDetectorIndex::from_pairs(&[5, -1, 5, 8, -1, 5], &[1, 2, 3, 4, 5, 6]).unwrap();
    let spectra = index.entries().map(|e| e.spectrum).collect_vec();
    assert_eq!(spectra, vec![5, -1, 8]);

    let mut a = index.cursor();
    let b = index.cursor();
    a.advance();
    assert_ne!(a, b);
    a.restart();
    assert_eq!(a, b);
}

#[test]
fn batch_failure_reports_offending_detector() {
    let index = SpectrumDetectorIndex::from_pairs(&[1, 2], &[100, 200]).unwrap();
    let err = index.spectra(&[100, 200, 300, 400]).unwrap_err();
    assert_eq!(err, SpecGeomError::UnmappedDetector(300));
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn shared_detectors_are_preserved() {
    let index = SpectrumDetectorIndex::from_pairs(&[1, 2, 2], &[7, 7, 8]).unwrap();
    assert_eq!(index.element_count(), 3);
    assert_eq!(index.spectra(&[7, 8]), Ok(vec![1, 2]));
    assert!(!index.is_one_to_one());
}

#[test]
fn shared_detector_maps_back_to_first_owner() {
    let general = GeneralIndex::from_pairs(&[1, 2], &[7, 7]).unwrap();
    assert_eq!(general.spectra_of(7), &[1, 2]);

    let index = SpectrumDetectorIndex::from(general);
    let dets = index.detectors(2).unwrap();
    assert_eq!(index.spectra(&dets), Ok(vec![1]));
    let dets = index.detectors(1).unwrap();
    assert_eq!(index.spectra(&dets), Ok(vec![1]));
}
