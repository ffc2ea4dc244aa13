//! Zero-cost wrappers for safe indexing.

wrap_usize! {
    #[doc = "Grammar symbol indices."]
    SymIdx
    #[doc = "Range over symbols."]
    range: SymRange
    #[doc = "Set of symbols."]
    set: SymSet
    #[doc = "Hash map from symbols to something."]
    hash map: SymHMap
    #[doc = "Total map from symbols to something."]
    map: SymMap with iter: SymMapIter
}

wrap_usize! {
    #[doc = "Quantifier-bound variable indices (de Bruijn levels)."]
    VarIdx
    #[doc = "Range over variables."]
    range: VarRange
    #[doc = "Set of variables."]
    set: VarSet
    #[doc = "Hash map from variables to something."]
    hash map: VarHMap
    #[doc = "Total map from variables to something."]
    map: VarMap with iter: VarMapIter
}

wrap_usize! {
    #[doc = "Generation worker indices."]
    GenIdx
    #[doc = "Range over workers."]
    range: GenRange
    #[doc = "Set of workers."]
    set: GenSet
    #[doc = "Hash map from workers to something."]
    hash map: GenHMap
    #[doc = "Total map from workers to something."]
    map: GenMap with iter: GenMapIter
}
