//! Capture of `foreach` loop bodies
//!
//! The nodes between a `foreach` directive and its matching `endforeach` are
//!     serialized to a markup fragment, which is then preprocessed once per loop value.
//! Only directives at the same element depth as the `foreach` are matched;
//!     nested loops are captured verbatim and expanded when the fragment is replayed.

use crate::error::{Error, Kind, Result};
use crate::node::{self, Node};

/// Reads nodes up to the `endforeach` matching an already-consumed `foreach`
///     and returns them as a markup fragment.
///
/// The `endforeach` itself is consumed but not included in the fragment.
pub fn capture(reader: &mut node::Reader) -> Result<String> {
    let depth = reader.depth();
    let mut nesting = 0_usize;
    let mut writer = node::Writer::new();
    loop {
        let node = match reader.read_node()? {
            None => return Err(missing_end_foreach()),
            Some((node, _)) => node,
        };
        match &node {
            Node::ProcessingInstruction { target, .. } if reader.depth() == depth => {
                match target.as_str() {
                    "foreach" => nesting += 1,
                    "endforeach" => match nesting.checked_sub(1) {
                        None => return writer.into_string(),
                        Some(n) => nesting = n,
                    },
                    _ => {}
                }
            }
            Node::EndElement { name } if reader.depth() < depth => {
                return Err(missing_end_foreach()
                    .with_note(format!("the element `{name}` was closed inside the loop")));
            }
            _ => {}
        }
        writer.write_node(&node)?;
    }
}

fn missing_end_foreach() -> Box<Error> {
    Error::new(Kind::Syntax, "expected `endforeach`")
        .with_note("every `foreach` must be closed by an `endforeach` in the same element")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads up to and including the first `foreach` directive, then captures the loop body.
    fn capture_after_foreach(source: &str) -> Result<(String, Vec<Node>)> {
        let mut reader = node::Reader::new(source);
        loop {
            match reader.read_node()? {
                Some((Node::ProcessingInstruction { target, .. }, _)) if target == "foreach" => {
                    break
                }
                Some(_) => continue,
                None => panic!("no foreach directive in the source"),
            }
        }
        let fragment = capture(&mut reader)?;
        let mut rest = vec![];
        while let Some((node, _)) = reader.read_node()? {
            rest.push(node);
        }
        Ok((fragment, rest))
    }

    #[test]
    fn simple_loop() {
        let source = "<r><?foreach v in a;b?><i>$(var.v)</i><?endforeach?></r>";
        let (fragment, rest) = capture_after_foreach(source).unwrap();
        assert_eq!(fragment, "<i>$(var.v)</i>");
        assert_eq!(rest, vec![Node::EndElement { name: "r".into() }]);
    }

    #[test]
    fn nested_loops_captured_verbatim() {
        let (fragment, _) = capture_after_foreach(
            "<r><?foreach a in 1;2?><?foreach b in x;y?><i/><?endforeach?><?endforeach?></r>",
        )
        .unwrap();
        assert_eq!(fragment, "<?foreach b in x;y?><i/><?endforeach?>");
    }

    #[test]
    fn directives_inside_child_elements_not_matched() {
        let (fragment, _) = capture_after_foreach(
            "<r><?foreach a in 1?><c><?endforeach?></c><?endforeach?></r>",
        )
        .unwrap();
        assert_eq!(fragment, "<c><?endforeach?></c>");
    }

    #[test]
    fn end_of_input() {
        let err = capture_after_foreach("<?foreach a in 1?><i/>").unwrap_err();
        assert_eq!(err.kind(), Kind::Syntax);
    }

    #[test]
    fn enclosing_element_closed() {
        let err = capture_after_foreach("<r><?foreach a in 1?><i/></r>").unwrap_err();
        assert_eq!(err.kind(), Kind::Syntax);
    }
}
