//! Topology declarations.

use std::collections::HashMap;

/// A graph of named hosts and switches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topo {
    hosts: Vec<String>,
    switches: Vec<String>,
    links: Vec<(String, String)>,
}

impl Topo {
    /// The POC topology: four switches in a partial mesh, `s5` hanging off `s3` and `s4`, two
    /// hosts on `s1` and two hosts on `s5`.
    ///
    /// ```text
    /// h1, h2 - s1          s5 - h3, h4
    /// s1 - s2, s1 - s3, s1 - s4
    /// s2 - s3, s3 - s4, s3 - s5, s4 - s5
    /// ```
    pub fn poc() -> Topo {
        let mut topo = Topo::default();
        let h1 = topo.add_host("h1");
        let h2 = topo.add_host("h2");
        let h3 = topo.add_host("h3");
        let h4 = topo.add_host("h4");

        let s1 = topo.add_switch("s1");
        let s2 = topo.add_switch("s2");
        let s3 = topo.add_switch("s3");
        let s4 = topo.add_switch("s4");
        let s5 = topo.add_switch("s5");

        topo.add_link(&h1, &s1);
        topo.add_link(&h2, &s1);
        topo.add_link(&h3, &s5);
        topo.add_link(&h4, &s5);

        topo.add_link(&s1, &s2);
        topo.add_link(&s1, &s3);
        topo.add_link(&s1, &s4);
        topo.add_link(&s2, &s3);
        topo.add_link(&s3, &s4);
        topo.add_link(&s3, &s5);
        topo.add_link(&s4, &s5);
        topo
    }

    fn add_host(&mut self, name: &str) -> String {
        self.hosts.push(name.to_string());
        name.to_string()
    }

    fn add_switch(&mut self, name: &str) -> String {
        self.switches.push(name.to_string());
        name.to_string()
    }

    fn add_link(&mut self, a: &str, b: &str) {
        self.links.push((a.to_string(), b.to_string()));
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn switches(&self) -> &[String] {
        &self.switches
    }

    /// Links in declaration order. Interface numbering depends on this order.
    pub fn links(&self) -> &[(String, String)] {
        &self.links
    }

    pub fn is_switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }

    /// Interface names each link end gets, `(a-ethN, b-ethM)`. Hosts count from 0, switches
    /// from 1.
    pub fn link_intfs(&self) -> Vec<(String, String)> {
        let mut next = HashMap::<String, u32>::new();
        let mut take = |node: &str, first: u32| -> String {
            let n = next.entry(node.to_string()).or_insert(first);
            let name = format!("{}-eth{}", node, n);
            *n += 1;
            name
        };
        let mut result = Vec::with_capacity(self.links.len());
        for (a, b) in self.links.iter() {
            let a_first = if self.is_switch(a) { 1 } else { 0 };
            let b_first = if self.is_switch(b) { 1 } else { 0 };
            let one = take(a, a_first);
            let two = take(b, b_first);
            result.push((one, two));
        }
        result
    }

    /// All interface names that belong to `switch`.
    pub fn switch_intfs(&self, switch: &str) -> Vec<String> {
        let prefix = format!("{}-eth", switch);
        self.link_intfs()
            .into_iter()
            .flat_map(|(a, b)| vec![a, b])
            .filter(|i| i.starts_with(&prefix))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn poc_shape() {
        for _ in 0..3 {
            let topo = Topo::poc();
            assert_eq!(topo.hosts().len(), 4);
            assert_eq!(topo.switches().len(), 5);
            assert_eq!(topo.links().len(), 11);
            assert_eq!(topo, Topo::poc());
        }
    }

    #[test]
    fn poc_names() {
        let topo = Topo::poc();
        assert_eq!(topo.hosts(), &["h1", "h2", "h3", "h4"]);
        assert_eq!(topo.switches(), &["s1", "s2", "s3", "s4", "s5"]);
    }

    #[test]
    fn interface_numbering() {
        let topo = Topo::poc();
        let intfs = topo.link_intfs();
        assert_eq!(intfs[0], ("h1-eth0".to_string(), "s1-eth1".to_string()));
        assert_eq!(intfs[1], ("h2-eth0".to_string(), "s1-eth2".to_string()));
        assert_eq!(intfs[2], ("h3-eth0".to_string(), "s5-eth1".to_string()));
        assert_eq!(intfs[4], ("s1-eth3".to_string(), "s2-eth1".to_string()));
        assert_eq!(intfs[10], ("s4-eth3".to_string(), "s5-eth4".to_string()));
        assert_eq!(
            topo.switch_intfs("s1"),
            vec!["s1-eth1", "s1-eth2", "s1-eth3", "s1-eth4", "s1-eth5"]
        );
        assert_eq!(topo.switch_intfs("s3").len(), 4);
    }
}
