//! Namespace-agnostic GML/WFS response parsing.
//!
//! WFS endpoints disagree about namespace prefixes (`gml:posList`,
//! `posList`, vendor prefixes on feature types), so elements are looked
//! up by local tag name only. Geometry is reconstructed from
//! `posList`/`pos` runs, keeping interior rings of multi-part polygons.

use crate::geometry::{GeometryKind, HitGeometry};

struct ScannedTag<'a> {
    local: &'a str,
    /// Byte offset of `<`.
    start: usize,
    /// Byte offset just past `>`.
    end: usize,
    closing: bool,
    self_closing: bool,
}

/// Scan the next element tag at or after `from`, skipping comments,
/// declarations and processing instructions. Attribute values may
/// contain `>`; the scan honours quoting.
fn next_tag(xml: &str, mut from: usize) -> Option<ScannedTag<'_>> {
    loop {
        let lt = xml[from..].find('<')? + from;
        let rest = &xml[lt..];
        if rest.starts_with("<!--") {
            from = lt + rest.find("-->")? + 3;
            continue;
        }
        if rest.starts_with("<?") || rest.starts_with("<!") {
            from = lt + rest.find('>')? + 1;
            continue;
        }

        let mut quote: Option<char> = None;
        let mut gt = None;
        for (offset, ch) in rest.char_indices().skip(1) {
            match (quote, ch) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(ch),
                (None, '>') => {
                    gt = Some(lt + offset);
                    break;
                }
                (None, _) => {}
            }
        }
        let gt = gt?;

        let inner = &xml[lt + 1..gt];
        let closing = inner.starts_with('/');
        let self_closing = !closing && inner.ends_with('/');
        let name = inner.trim_start_matches('/');
        let name_end = name
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(name.len());
        let qualified = &name[..name_end];
        let local_start = qualified.rfind(':').map(|i| i + 1).unwrap_or(0);
        return Some(ScannedTag {
            local: &qualified[local_start..],
            start: lt,
            end: gt + 1,
            closing,
            self_closing,
        });
    }
}

/// Inner content of every element with the given local name, in
/// document order. Matching is namespace-agnostic; nested same-name
/// elements are swallowed by their outermost occurrence.
pub fn elements<'a>(xml: &'a str, local_name: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut pos = 0;
    while let Some(tag) = next_tag(xml, pos) {
        pos = tag.end;
        if tag.closing || tag.local != local_name {
            continue;
        }
        if tag.self_closing {
            found.push(&xml[tag.end..tag.end]);
            continue;
        }
        let mut depth = 1u32;
        let mut search = tag.end;
        while let Some(candidate) = next_tag(xml, search) {
            search = candidate.end;
            if candidate.local != local_name {
                continue;
            }
            if candidate.closing {
                depth -= 1;
                if depth == 0 {
                    found.push(&xml[tag.end..candidate.start]);
                    pos = candidate.end;
                    break;
                }
            } else if !candidate.self_closing {
                depth += 1;
            }
        }
    }
    found
}

/// First element with the given local name, if any.
pub fn first_element<'a>(xml: &'a str, local_name: &str) -> Option<&'a str> {
    elements(xml, local_name).into_iter().next()
}

/// Text content of a fragment: tags stripped, entities decoded,
/// whitespace collapsed.
pub fn text(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    let decoded = out
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a whitespace-separated coordinate run (`posList`/`pos` text).
pub fn coordinates(run: &str) -> Vec<f64> {
    run.split_whitespace()
        .filter_map(|token| token.parse::<f64>().ok())
        .collect()
}

/// Reconstruct hit geometry from a feature fragment.
///
/// Polygons keep every ring (`posList` runs in document order, exterior
/// first); more than one `Polygon` element — `MultiSurface` members —
/// yields a multi-polygon. Fragments without surface geometry fall back
/// to `LineString`, then to a single `pos` point.
pub fn parse_geometry(fragment: &str) -> Option<HitGeometry> {
    let polygons = elements(fragment, "Polygon");
    if !polygons.is_empty() {
        let parts: Vec<Vec<Vec<f64>>> = polygons
            .iter()
            .map(|polygon| {
                let mut runs: Vec<Vec<f64>> = elements(polygon, "posList")
                    .iter()
                    .map(|run| coordinates(run))
                    .collect();
                if runs.is_empty() {
                    // Degenerate services list ring vertices as pos elements.
                    let vertices: Vec<f64> = elements(polygon, "pos")
                        .iter()
                        .flat_map(|run| coordinates(run))
                        .collect();
                    if !vertices.is_empty() {
                        runs.push(vertices);
                    }
                }
                runs
            })
            .filter(|runs| !runs.is_empty())
            .collect();
        if parts.is_empty() {
            return None;
        }
        let kind = if parts.len() > 1 {
            GeometryKind::MultiPolygon
        } else {
            GeometryKind::Polygon
        };
        return Some(HitGeometry { kind, parts });
    }

    if let Some(line) = first_element(fragment, "LineString") {
        let run = coordinates(first_element(line, "posList").unwrap_or(""));
        if run.len() >= 4 {
            return Some(HitGeometry {
                kind: GeometryKind::LineString,
                parts: vec![vec![run]],
            });
        }
    }

    let run = coordinates(first_element(fragment, "pos").unwrap_or(""));
    if run.len() >= 2 {
        return Some(HitGeometry {
            kind: GeometryKind::Point,
            parts: vec![vec![vec![run[0], run[1]]]],
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER_POINT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs" xmlns:gml="http://www.opengis.net/gml">
  <wfs:member>
    <dog:Strasse xmlns:dog="http://example.org/dog">
      <dog:strassenname>Mollerstraße</dog:strassenname>
      <gml:Point><gml:pos>565874.74 5934140.63</gml:pos></gml:Point>
    </dog:Strasse>
  </wfs:member>
  <wfs:member>
    <dog:Strasse xmlns:dog="http://example.org/dog">
      <dog:strassenname>Mollerweg</dog:strassenname>
      <gml:Point><gml:pos>565000.00 5934000.00</gml:pos></gml:Point>
    </dog:Strasse>
  </wfs:member>
</wfs:FeatureCollection>"#;

    const MULTI_POLYGON: &str = r#"<app:geom xmlns:app="http://example.org/app">
<gml:MultiSurface xmlns:gml="http://www.opengis.net/gml">
  <gml:surfaceMember>
    <gml:Polygon>
      <gml:exterior><gml:LinearRing><gml:posList>0 0 10 0 10 10 0 10 0 0</gml:posList></gml:LinearRing></gml:exterior>
      <gml:interior><gml:LinearRing><gml:posList>4 4 6 4 6 6 4 6 4 4</gml:posList></gml:LinearRing></gml:interior>
    </gml:Polygon>
  </gml:surfaceMember>
  <gml:surfaceMember>
    <gml:Polygon>
      <gml:exterior><gml:LinearRing><gml:posList>100 0 102 0 102 2 100 2 100 0</gml:posList></gml:LinearRing></gml:exterior>
    </gml:Polygon>
  </gml:surfaceMember>
</gml:MultiSurface>
</app:geom>"#;

    #[test]
    fn elements_are_found_regardless_of_prefix() {
        assert_eq!(elements(MEMBER_POINT, "member").len(), 2);
        assert_eq!(elements(MEMBER_POINT, "Strasse").len(), 2);
        assert_eq!(elements(MEMBER_POINT, "pos").len(), 2);
        assert!(elements(MEMBER_POINT, "hausnummer").is_empty());
    }

    #[test]
    fn member_fields_extract_as_text() {
        let members = elements(MEMBER_POINT, "member");
        let name = text(first_element(members[0], "strassenname").expect("name"));
        assert_eq!(name, "Mollerstraße");
    }

    #[test]
    fn text_decodes_entities_and_collapses_whitespace() {
        assert_eq!(text("  Park &amp; Ride \n <b>lot</b> "), "Park & Ride lot");
    }

    #[test]
    fn self_closing_elements_yield_empty_content() {
        let xml = "<root><gml:pos/><gml:pos>1 2</gml:pos></root>";
        let found = elements(xml, "pos");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], "");
        assert_eq!(coordinates(found[1]), vec![1.0, 2.0]);
    }

    #[test]
    fn attribute_values_may_contain_angle_brackets() {
        let xml = r#"<root><a title="x > y"><gml:pos>3 4</gml:pos></a></root>"#;
        assert_eq!(coordinates(elements(xml, "pos")[0]), vec![3.0, 4.0]);
    }

    #[test]
    fn nested_same_name_elements_swallowed_by_outermost() {
        let xml = "<f><g><x>inner</x></g></f>";
        let outer = elements(xml, "g");
        assert_eq!(outer.len(), 1);
        assert_eq!(outer[0], "<x>inner</x>");
    }

    #[test]
    fn point_geometry_from_pos() {
        let member = elements(MEMBER_POINT, "member")[0];
        let hit = parse_geometry(member).expect("geometry");
        assert_eq!(hit.kind, GeometryKind::Point);
        assert_eq!(hit.parts, vec![vec![vec![565874.74, 5934140.63]]]);
    }

    #[test]
    fn multi_polygon_keeps_interior_rings() {
        let hit = parse_geometry(MULTI_POLYGON).expect("geometry");
        assert_eq!(hit.kind, GeometryKind::MultiPolygon);
        assert_eq!(hit.parts.len(), 2);
        // First part: exterior + interior ring.
        assert_eq!(hit.parts[0].len(), 2);
        assert_eq!(hit.parts[0][1][0], 4.0);
        // Second part: exterior only.
        assert_eq!(hit.parts[1].len(), 1);
        assert_eq!(hit.parts[1][0].len(), 10);
    }

    #[test]
    fn single_polygon_is_polygon_kind() {
        let xml = "<geom><gml:Polygon><gml:exterior><gml:LinearRing>\
<gml:posList>0 0 4 0 4 4 0 4 0 0</gml:posList>\
</gml:LinearRing></gml:exterior></gml:Polygon></geom>";
        let hit = parse_geometry(xml).expect("geometry");
        assert_eq!(hit.kind, GeometryKind::Polygon);
        assert_eq!(hit.parts.len(), 1);
    }

    #[test]
    fn garbage_fragment_has_no_geometry() {
        assert_eq!(parse_geometry("<member><name>no geometry</name></member>"), None);
    }

    #[test]
    fn coordinates_skip_unparseable_tokens() {
        assert_eq!(coordinates("1.5 abc 2.5"), vec![1.5, 2.5]);
    }
}
